//! Lowering details beyond the basic scenarios: temporaries, race markers,
//! blank targets and nesting.

use insta::assert_snapshot;

use chansel::config::Options;
use chansel::diagnostics::CompileError;
use chansel::parser::ast::{LocalKind, Stmt};
use chansel::session::Session;

mod common;
use common::{lowered, lowered_with};

#[test]
fn receive_into_wider_target_goes_through_temporary() {
    let src = r#"
func main(c chan int, d chan int) {
    var a any
    select {
    case a = <-c:
        f()
    case <-d:
        g()
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main(c chan int, d chan int) {
        var a any
        breakable {
            var %cases [2]scase
            var %order [4]uint16 (uninit)
            var %tmp int
            %cases[1].c = (unsafe.Pointer)(c)
            %cases[1].elem = (unsafe.Pointer)(&%tmp)
            %cases[0].c = (unsafe.Pointer)(d)
            %chosen, %recv_ok = selectgo((*uint8)(&%cases[0]), (*uint8)(&%order[0]), nil, 0, 2, false)
            varkill %cases
            varkill %order
            if %chosen == 0 {
                g()
                break
            }
            if %chosen == 1 {
                a = any(%tmp)
                f()
                break
            }
        }
    }
    ");
}

#[test]
fn literal_send_value_is_copied_once() {
    let src = r#"
func main(c chan int) {
    select {
    case c <- 1 + 2:
        f()
    default:
        g()
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main(c chan int) {
        breakable {
            var %tmp int = 1 + 2
            if selectnbsend(c, &%tmp) {
                f()
            } else {
                g()
            }
            break
        }
    }
    ");
}

#[test]
fn probe_with_ok_flag() {
    let src = r#"
func main(c chan int) {
    select {
    case v, ok := <-c:
        f(v)
    default:
    }
}
"#;
    let out = lowered(src);
    assert!(out.contains("if selectnbrecv2(&v, &ok, c) {"), "{out}");
}

#[test]
fn blank_ok_probe_is_a_plain_probe() {
    let src = r#"
func main(c chan int) {
    select {
    case _, _ = <-c:
        f()
    default:
        g()
    }
}
"#;
    let out = lowered(src);
    assert!(out.contains("if selectnbrecv(nil, c) {"), "{out}");
}

#[test]
fn direct_two_value_receive() {
    let src = r#"
func main(c chan int) {
    select {
    case v, ok := <-c:
        f(v)
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main(c chan int) {
        breakable {
            var v int
            var ok bool
            v, ok = <-c
            f(v)
            break
        }
    }
    ");
}

#[test]
fn default_only_select_runs_the_body() {
    let src = r#"
func main() {
    select {
    default:
        f()
    }
}
"#;
    assert_snapshot!(lowered(src), @r"
    func main() {
        breakable {
            f()
            break
        }
    }
    ");
}

#[test]
fn race_mode_registers_every_case() {
    let src = r#"
func main(a chan int, b chan int) {
    select {
    case <-a:
        f()
    case b <- 3:
        g()
    }
}
"#;
    let out = lowered_with(src, Options { race: true, ..Options::default() });
    assert!(out.contains("var %pcs [2]uintptr"), "{out}");
    assert!(out.contains("selectsetpc(&%pcs[1])"), "{out}");
    assert!(out.contains("selectsetpc(&%pcs[0])"), "{out}");
    assert!(out.contains("&%pcs[0], 1, 1, false)"), "{out}");
    assert!(out.contains("varkill %pcs"), "{out}");

    let plain = lowered(src);
    assert!(!plain.contains("%pcs"), "{plain}");
}

#[test]
fn case_inits_are_hoisted_in_source_order() {
    let src = r#"
func main(a chan int, b chan int) {
    select {
    case x := <-a:
        f(x)
    case y := <-b:
        g(y)
    case <-a:
        h()
    }
}
"#;
    let out = lowered(src);
    let x = out.find("var x int").expect("x declared");
    let y = out.find("var y int").expect("y declared");
    let call = out.find("selectgo(").expect("multiplexer call");
    assert!(x < y && y < call, "{out}");
    // Receives fill descriptors from the top down.
    assert!(out.contains("%cases[2].elem = (unsafe.Pointer)(&x)"), "{out}");
    assert!(out.contains("%cases[1].elem = (unsafe.Pointer)(&y)"), "{out}");
    assert!(out.contains("%cases[0].c = (unsafe.Pointer)(a)"), "{out}");
    assert!(!out.contains("%cases[0].elem"), "{out}");
}

#[test]
fn nested_selects_lower_inside_out() {
    let src = r#"
func main(a chan int, b chan int) {
    for {
        select {
        case <-a:
            select {
            case <-b:
                break
            default:
            }
        case <-b:
            break
        }
    }
}
"#;
    let session = Session::default();
    let program = chansel::lower_source(src, &session).unwrap();
    let func = &program.functions[0].node;
    let temps: Vec<&str> = func.locals.temps().map(|(_, l)| l.name.as_str()).collect();
    assert!(temps.contains(&"%cases"), "{temps:?}");
    assert!(!func.locals.iter().any(|(_, l)| l.kind == LocalKind::Temp && l.name.is_empty()));

    let text = chansel::pretty::pretty_print(&program);
    assert!(!text.contains("select {"), "{text}");
    assert_eq!(text.matches("breakable {").count(), 2, "{text}");
    assert!(matches!(func.body[0].node, Stmt::For { .. }));
}

#[test]
fn lowering_is_idempotent() {
    let src = "func main(c chan int) {\n    select {\n    case <-c:\n    }\n}\n";
    let session = Session::default();
    let mut program = chansel::lower_source(src, &session).unwrap();
    let before = chansel::pretty::pretty_print(&program);
    chansel::select::lower_program(&mut program, &session).unwrap();
    assert_eq!(chansel::pretty::pretty_print(&program), before);
}

#[test]
fn unchecked_select_is_an_internal_error() {
    let src = "func main(c chan int) {\n    select {\n    case <-c:\n    }\n}\n";
    let mut program = chansel::parse_source(src).unwrap();
    let err = chansel::select::lower_program(&mut program, &Session::default()).unwrap_err();
    assert!(matches!(err, CompileError::Internal { .. }));
}

const CHANNEL_OF_CHANNELS: &str = "func main(cc chan chan int, d chan int) {\n";

#[test]
fn direct_send_keeps_channel_before_value() {
    let src = format!("{CHANNEL_OF_CHANNELS}    select {{\n    case <-cc <- f():\n        a()\n    }}\n}}\n");
    assert_snapshot!(lowered(&src), @r"
    func main(cc chan chan int, d chan int) {
        breakable {
            <-cc <- f()
            a()
            break
        }
    }
    ");
}

#[test]
fn probe_send_evaluates_channel_before_value() {
    let src = format!("{CHANNEL_OF_CHANNELS}    select {{\n    case <-cc <- f():\n        a()\n    default:\n    }}\n}}\n");
    assert_snapshot!(lowered(&src), @r"
    func main(cc chan chan int, d chan int) {
        breakable {
            var %tmp chan int = <-cc
            var %tmp1 int = f()
            if selectnbsend(%tmp, &%tmp1) {
                a()
            }
            break
        }
    }
    ");
}

#[test]
fn general_send_evaluates_channel_before_value() {
    let src = format!(
        "{CHANNEL_OF_CHANNELS}    select {{\n    case <-cc <- f():\n        a()\n    case <-d:\n        b()\n    }}\n}}\n"
    );
    let out = lowered(&src);
    let channel = out.find("var %tmp chan int = <-cc").expect("channel spilled");
    let value = out.find("var %tmp1 int = f()").expect("value copied");
    let fill = out.find("%cases[0].c = (unsafe.Pointer)(%tmp)").expect("descriptor fill");
    assert!(channel < value && value < fill, "{out}");
    assert!(out.contains("%cases[0].elem = (unsafe.Pointer)(&%tmp1)"), "{out}");
    assert!(out.contains("%cases[1].c = (unsafe.Pointer)(d)"), "{out}");
}

#[test]
fn addressable_send_value_does_not_spill_channel() {
    let src = format!(
        "{CHANNEL_OF_CHANNELS}    var x int\n    select {{\n    case <-cc <- x:\n        a()\n    case <-d:\n        b()\n    }}\n}}\n"
    );
    let out = lowered(&src);
    assert!(out.contains("%cases[0].c = (unsafe.Pointer)(<-cc)"), "{out}");
    assert!(out.contains("%cases[0].elem = (unsafe.Pointer)(&x)"), "{out}");
    assert!(!out.contains("%tmp"), "{out}");
}
