//! The closed capability set. Four capability ids, each with a fixed read/effect
//! mode; `fs.list`/`fs.exists` are tools that piggyback on the `fs.read`
//! capability rather than declaring ids of their own.

/// The entire set of capability ids a program may declare in its `cap {}`
/// header. Closed: nothing outside this list is ever valid, now or later.
pub const KNOWN_CAPABILITIES: &[&str] = &["fs.read", "fs.write", "http.get", "sh.exec"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityMode {
    /// May be invoked with `call?` as well as `do` — has no side effects.
    Read,
    /// May only be invoked with `do` — mutates state outside the program.
    Effect,
}

pub fn mode_of(capability_id: &str) -> CapabilityMode {
    match capability_id {
        "fs.read" | "http.get" => CapabilityMode::Read,
        "fs.write" | "sh.exec" => CapabilityMode::Effect,
        _ => CapabilityMode::Effect,
    }
}

/// Maps a tool name as written at a call site (`fs.read`, `fs.list`,
/// `fs.exists`, `fs.write`, `http.get`, `sh.exec`) to the capability id that
/// gates it. Returns `None` for unknown tool names.
pub fn capability_id_for_tool(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        "fs.read" | "fs.list" | "fs.exists" => Some("fs.read"),
        "fs.write" => Some("fs.write"),
        "http.get" => Some("http.get"),
        "sh.exec" => Some("sh.exec"),
        _ => None,
    }
}
