//! Protocol Constants
//!
//! ACP method names and protocol-level defaults shared by both peers.

/// JSON-RPC method names used by the Agent Client Protocol
pub mod methods {
    /// Capability negotiation (client → agent)
    pub const INITIALIZE: &str = "initialize";

    /// Create a new session (client → agent)
    pub const SESSION_NEW: &str = "session/new";
    /// Load an existing session by id (client → agent)
    pub const SESSION_LOAD: &str = "session/load";
    /// Run a prompt turn (client → agent)
    pub const SESSION_PROMPT: &str = "session/prompt";
    /// Cooperative cancellation (client → agent, notification)
    pub const SESSION_CANCEL: &str = "session/cancel";
    /// Switch the session mode (client → agent)
    pub const SESSION_SET_MODE: &str = "session/set_mode";
    /// Change a session configuration option (client → agent)
    pub const SESSION_SET_CONFIG_OPTION: &str = "session/set_config_option";

    /// Streamed session update (agent → client, notification)
    pub const SESSION_UPDATE: &str = "session/update";
    /// Permission round-trip (agent → client)
    pub const SESSION_REQUEST_PERMISSION: &str = "session/request_permission";

    /// Read a text file from the client's filesystem (agent → client)
    pub const FS_READ_TEXT_FILE: &str = "fs/read_text_file";
    /// Write a text file on the client's filesystem (agent → client)
    pub const FS_WRITE_TEXT_FILE: &str = "fs/write_text_file";

    /// Spawn a terminal subprocess on the client (agent → client)
    pub const TERMINAL_CREATE: &str = "terminal/create";
    /// Snapshot captured terminal output (agent → client)
    pub const TERMINAL_OUTPUT: &str = "terminal/output";
    /// Await subprocess exit (agent → client)
    pub const TERMINAL_WAIT_FOR_EXIT: &str = "terminal/wait_for_exit";
    /// Deliver a signal to the subprocess (agent → client)
    pub const TERMINAL_KILL: &str = "terminal/kill";
    /// Release the terminal resource (agent → client)
    pub const TERMINAL_RELEASE: &str = "terminal/release";
}

/// Protocol-level default values
pub mod defaults {
    /// Protocol version negotiated during `initialize`
    pub const PROTOCOL_VERSION: &str = "1";

    /// Default outbound request timeout in milliseconds
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Default cap on the pending-request table
    pub const MAX_PENDING_REQUESTS: usize = 1000;

    /// Default HTTP port (agent mode)
    pub const HTTP_PORT: u16 = 3000;

    /// Default HTTP host (agent mode)
    pub const HTTP_HOST: &str = "localhost";

    /// Default HTTP endpoint path
    pub const HTTP_PATH: &str = "/jsonrpc";

    /// Default maximum HTTP retry attempts
    pub const HTTP_MAX_RETRIES: u32 = 3;

    /// Initial HTTP retry backoff in milliseconds
    pub const HTTP_RETRY_BASE_MS: u64 = 100;

    /// Cap on the HTTP retry backoff in milliseconds
    pub const HTTP_RETRY_CAP_MS: u64 = 5_000;

    /// Grace period before a subprocess transport is force-killed on close
    pub const SUBPROCESS_KILL_GRACE_MS: u64 = 5_000;
}
