pub mod chain;
pub mod cypher;
pub mod history;

pub use chain::{DEFAULT_TOP_K, GraphQaChain, QaAnswer};
pub use cypher::{ensure_read_only, strip_code_fences};
pub use history::{ChatHistory, ChatTurn, GREETING, Role};
