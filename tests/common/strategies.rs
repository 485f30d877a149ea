use proptest::prelude::*;

use super::processors::Behaviour;

/// Outcomes a processor may have, without hangs or panics
pub fn behaviour_strategy() -> impl Strategy<Value = Behaviour> {
    prop_oneof![
        3 => Just(Behaviour::Succeed),
        1 => "[a-z][a-z ]{0,20}".prop_map(Behaviour::Fail),
    ]
}

/// A batch script: one behaviour per input
pub fn batch_script_strategy(max_len: usize) -> impl Strategy<Value = Vec<Behaviour>> {
    prop::collection::vec(behaviour_strategy(), 0..=max_len)
}
