//! Case-shape diagnostics and normalized output.

use insta::assert_snapshot;

use chansel::diagnostics::DiagnosticKind;

mod common;
use common::{diagnostics, messages, normalized, offset_of};

#[test]
fn case_lists_are_rejected() {
    let src = r#"
func main(a chan int, b chan int) {
    select {
    case <-a, <-b:
        f()
    }
}
"#;
    let diags = diagnostics(src);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::CaseListNotAllowed);
    assert_eq!(diags[0].msg, "select cases cannot be lists");
    assert_eq!(diags[0].span.start, offset_of(src, "case", 0));
}

#[test]
fn assignment_needs_a_receive() {
    let src = r#"
func main(c chan int) {
    var x int
    select {
    case x = 1:
        f()
    case <-c:
        g()
    }
}
"#;
    let diags = diagnostics(src);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::AssignmentWithoutReceive);
    assert_eq!(diags[0].msg, "select assignment must have receive on right hand side");
    assert_eq!(diags[0].span.start, offset_of(src, "x = 1", 0));
}

#[test]
fn bare_name_reports_at_the_case() {
    let src = r#"
func main(c chan int) {
    select {
    case c:
        f()
    }
}
"#;
    let diags = diagnostics(src);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::InvalidCaseForm);
    assert_eq!(diags[0].msg, "select case must be receive, send, or assign receive");
    assert_eq!(diags[0].span.start, offset_of(src, "case", 0));
}

#[test]
fn other_expressions_report_at_the_guard() {
    let src = r#"
func main(c chan int) {
    select {
    case f():
        g()
    }
}
"#;
    let diags = diagnostics(src);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::InvalidCaseForm);
    assert_eq!(diags[0].span.start, offset_of(src, "f()", 0));
}

#[test]
fn errors_in_several_cases_are_all_reported() {
    let src = r#"
func main(a chan int, b chan int) {
    select {
    case a:
        f()
    case <-a, <-b:
        g()
    default:
    default:
    }
}
"#;
    let kinds: Vec<DiagnosticKind> = diagnostics(src).iter().map(|d| d.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DiagnosticKind::InvalidCaseForm,
            DiagnosticKind::CaseListNotAllowed,
            DiagnosticKind::MultipleDefaults,
        ]
    );
}

#[test]
fn dropped_case_bodies_are_still_checked() {
    let src = r#"
func main(c chan int) {
    select {
    case c:
        y + 1
    }
}
"#;
    let msgs = messages(src);
    assert!(msgs.contains(&"select case must be receive, send, or assign receive".to_string()));
    assert!(msgs.contains(&"undefined: y".to_string()), "{msgs:?}");
}

#[test]
fn receive_from_send_only_channel() {
    let src = r#"
func main(c chan<- int) {
    select {
    case <-c:
        f()
    }
}
"#;
    let msgs = messages(src);
    assert_eq!(msgs, vec!["invalid operation: cannot receive from send-only channel c (type chan<- int)"]);
}

#[test]
fn case_variables_are_scoped_to_their_case() {
    let src = r#"
func main(a chan int, b chan int) {
    select {
    case v := <-a:
        f(v)
    case <-b:
        g(v)
    }
}
"#;
    assert_eq!(messages(src), vec!["undefined: v"]);
}

#[test]
fn normalized_form_hoists_declarations() {
    let src = r#"
func main(a chan int, b chan bool) {
    var x any
    select {
    case v, ok := <-a:
        f(v)
    case x = <-a:
        g()
    case b <- true:
        h()
    }
}
"#;
    assert_snapshot!(normalized(src), @r"
    func main(a chan int, b chan bool) {
        var x any
        select {
        case var v int; var ok bool; v, ok = <-a:
            f(v)
        case x = <-a:
            g()
        case b <- true:
            h()
        }
    }
    ");
}
