//! Property-based tests for descriptor layout and strategy choice.

use proptest::prelude::*;

use chansel::select::descriptor::{Direction, assign_slots};
use chansel::select::strategy::{Strategy as Lowering, select_strategy};
use chansel::session::Session;

fn arb_directions() -> impl Strategy<Value = Vec<Direction>> {
    prop::collection::vec(prop_oneof![Just(Direction::Send), Just(Direction::Recv)], 0..12)
}

/// `func main(c chan int)` with one select built from `sends`.
fn select_source(sends: &[bool], has_default: bool) -> String {
    let mut src = String::from("func main(c chan int) {\n    select {\n");
    for (i, send) in sends.iter().enumerate() {
        if *send {
            src.push_str(&format!("    case c <- {i}:\n        f({i})\n"));
        } else {
            src.push_str(&format!("    case <-c:\n        f({i})\n"));
        }
    }
    if has_default {
        src.push_str("    default:\n        g()\n");
    }
    src.push_str("    }\n}\n");
    src
}

proptest! {
    #[test]
    fn slots_form_a_permutation(dirs in arb_directions()) {
        let slots = assign_slots(&dirs);
        let mut sorted = slots.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..dirs.len()).collect::<Vec<_>>());
    }

    #[test]
    fn sends_fill_upward_receives_downward(dirs in arb_directions()) {
        let n = dirs.len();
        let slots = assign_slots(&dirs);
        let sends: Vec<usize> = dirs.iter().zip(&slots).filter(|(d, _)| **d == Direction::Send).map(|(_, s)| *s).collect();
        let recvs: Vec<usize> = dirs.iter().zip(&slots).filter(|(d, _)| **d == Direction::Recv).map(|(_, s)| *s).collect();
        prop_assert_eq!(sends.clone(), (0..sends.len()).collect::<Vec<_>>());
        prop_assert_eq!(recvs.clone(), (0..recvs.len()).map(|k| n - 1 - k).collect::<Vec<_>>());
    }

    #[test]
    fn lowered_select_matches_its_strategy(
        sends in prop::collection::vec(any::<bool>(), 0..6),
        has_default in any::<bool>(),
    ) {
        let src = select_source(&sends, has_default);
        let program = chansel::lower_source(&src, &Session::default()).unwrap();
        let text = chansel::pretty::pretty_print(&program);
        let total = sends.len() + usize::from(has_default);

        prop_assert!(!text.contains("select {"), "{}", text);
        match select_strategy(total, has_default) {
            Lowering::BlockForever => prop_assert!(text.contains("block()")),
            Lowering::Direct => prop_assert!(!text.contains("select")),
            Lowering::Probe => prop_assert!(text.contains("if selectnb")),
            Lowering::General => {
                let nsends = sends.iter().filter(|s| **s).count();
                let nrecvs = sends.len() - nsends;
                let tail = format!(", {nsends}, {nrecvs}, {has_default})");
                prop_assert!(text.contains(&tail), "{}", text);
                prop_assert_eq!(text.matches("if %chosen").count(), total);
            }
        }
    }
}
