//! End-to-end select lowering scenarios, checked against the printed
//! lowered program. Run `cargo insta review` after intentional changes.

use insta::assert_snapshot;

use chansel::diagnostics::DiagnosticKind;
use chansel::diagnostics::Diagnostics;
use chansel::parser::ast::Stmt;
use chansel::select::CaseKind;
use chansel::span::LineIndex;

mod common;
use common::{diagnostics, lowered, offset_of};

#[test]
fn empty_select_blocks_forever() {
    let src = "func main() {\n    select {}\n}\n";
    assert_snapshot!(lowered(src), @r"
    func main() {
        breakable {
            block()
        }
    }
    ");
}

#[test]
fn single_receive_runs_directly() {
    let src = r#"
func main(c chan int) {
    select {
    case <-c:
        f()
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main(c chan int) {
        breakable {
            <-c
            f()
            break
        }
    }
    ");
}

#[test]
fn receive_with_default_probes() {
    let src = r#"
func main(c chan int) {
    select {
    case v := <-c:
        f(v)
    default:
        g()
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main(c chan int) {
        breakable {
            var v int
            if selectnbrecv(&v, c) {
                f(v)
            } else {
                g()
            }
            break
        }
    }
    ");
}

#[test]
fn second_default_is_reported_against_the_first() {
    let src = r#"
func main(c chan int) {
    select {
    default:
        f()
    case <-c:
        g()
    default:
        h()
    }
}
"#;
    let diags = diagnostics(src);
    assert_eq!(diags.len(), 1);
    let diag = &diags[0];
    assert_eq!(diag.kind, DiagnosticKind::MultipleDefaults);
    assert_eq!(diag.msg, "multiple defaults in select (first at 4:5)");
    assert_eq!(diag.span.start, offset_of(src, "default", 1));
    let first = diag.related.expect("first default position");
    assert_eq!(first.start, offset_of(src, "default", 0));
    assert_eq!(LineIndex::new(src).position(first.start).to_string(), "4:5");

    // The construct keeps the first default and the receive, in order.
    let mut program = chansel::parse_source(src).unwrap();
    let mut sink = Diagnostics::new(src);
    chansel::typeck::type_check(&mut program, &mut sink);
    let Stmt::CheckedSelect(construct) = &program.functions[0].node.body[0].node else {
        panic!("select was not normalized");
    };
    let kinds: Vec<&str> = construct.cases.iter().map(|c| c.kind.name()).collect();
    assert_eq!(kinds, vec!["default", "recv"]);
    assert!(matches!(construct.cases[0].kind, CaseKind::Default));
    assert_eq!(construct.cases[0].body.len(), 1);
}

#[test]
fn send_receive_and_default_use_the_multiplexer() {
    let src = r#"
func main(c1 chan int, c2 chan int, x int) {
    select {
    case c1 <- x:
        A()
    case v, ok := <-c2:
        B()
    default:
        C()
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main(c1 chan int, c2 chan int, x int) {
        breakable {
            var %cases [2]scase
            var %order [4]uint16 (uninit)
            %cases[0].c = (unsafe.Pointer)(c1)
            %cases[0].elem = (unsafe.Pointer)(&x)
            var v int
            var ok bool
            %cases[1].c = (unsafe.Pointer)(c2)
            %cases[1].elem = (unsafe.Pointer)(&v)
            %chosen, %recv_ok = selectgo((*uint8)(&%cases[0]), (*uint8)(&%order[0]), nil, 1, 1, true)
            varkill %cases
            varkill %order
            if %chosen < 0 {
                C()
                break
            }
            if %chosen == 0 {
                A()
                break
            }
            if %chosen == 1 {
                ok = %recv_ok
                B()
                break
            }
        }
    }
    ");
}
