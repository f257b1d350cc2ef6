//! Object emission for lowered programs.

use chansel::config::Options;
use chansel::diagnostics::CompileError;
use chansel::session::Session;

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

fn compile(source: &str, options: Options) -> Result<Vec<u8>, CompileError> {
    chansel::compile_to_object(source, &Session::new(options))
}

const GENERAL: &str = r#"
func pump(a chan int, b chan int, x int) {
    var n int
    for n < 10 {
        select {
        case a <- x:
            n = n + 1
        case v, ok := <-b:
            if !ok {
                break
            }
            n = n + v
        default:
            tick()
        }
    }
    report(n)
}
"#;

#[test]
fn multiplexed_select_links_against_runtime() {
    let bytes = compile(GENERAL, Options::default()).unwrap();
    assert!(!bytes.is_empty());
    assert!(contains(&bytes, "pump"));
    assert!(contains(&bytes, "__chansel_selectgo"));
    assert!(contains(&bytes, "tick"));
}

#[test]
fn race_markers_are_emitted() {
    let bytes = compile(GENERAL, Options { race: true, ..Options::default() }).unwrap();
    assert!(contains(&bytes, "__chansel_selectsetpc"));
}

#[test]
fn every_strategy_compiles() {
    let src = r#"
func forever() {
    select {}
}

func one(c chan int) {
    select {
    case v := <-c:
        report(v)
    }
}

func probe(c chan bool) {
    select {
    case c <- true:
        sent()
    default:
    }
}
"#;
    let bytes = compile(src, Options::default()).unwrap();
    assert!(contains(&bytes, "__chansel_block"));
    assert!(contains(&bytes, "__chansel_chanrecv1"));
    assert!(contains(&bytes, "__chansel_selectnbsend"));
}

#[test]
fn extern_arity_must_agree() {
    let src = "func main() {\n    f()\n    f(1)\n}\n";
    let err = compile(src, Options::default()).unwrap_err();
    assert!(matches!(err, CompileError::Codegen { .. }), "{err}");
}

#[test]
fn unknown_target_is_rejected() {
    let options = Options { target: Some("not-a-real-triple".into()), ..Options::default() };
    let err = compile("func main() {\n}\n", options).unwrap_err();
    assert!(matches!(err, CompileError::Codegen { .. }), "{err}");
}

#[test]
fn semantic_errors_stop_before_codegen() {
    let err = compile("func main() {\n    select {\n    case x:\n    }\n}\n", Options::default()).unwrap_err();
    assert!(matches!(err, CompileError::Semantic { .. }), "{err}");
}
