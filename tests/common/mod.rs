#![allow(dead_code)]

pub use execwatch_test_utils::builders;
pub use execwatch_test_utils::fake_executor;
pub use execwatch_test_utils::{init_tracing, with_timeout};
