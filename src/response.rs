use serde::Serialize;

/// `{ "msg": ... }` envelope returned by commands.
#[derive(Debug, Serialize)]
pub struct MsgResponse {
    pub msg: String,
}

impl MsgResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}
