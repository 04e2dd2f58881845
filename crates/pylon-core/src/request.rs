//! The inbound call capability.

use crate::auth::{AuthState, UserInfo};
use crate::protocol::Protocol;

/// Read access to one inbound call, plus the two writes authentication makes.
///
/// Transports implement this once; the gateway core only ever sees the trait
/// object. Lookups return owned values so implementations are free to decode
/// lazily.
///
/// Header lookups are first-match: when a header repeats, the first value
/// wins. Header names compare case-insensitively.
pub trait Request: Send + Sync {
    /// HTTP method of the call, e.g. `GET`.
    fn http_method(&self) -> &str;

    /// Path with the query string removed.
    fn path(&self) -> &str;

    /// Path exactly as received, query string included.
    fn unparsed_path(&self) -> &str;

    /// Address of the immediate caller.
    fn client_ip(&self) -> &str;

    /// Value of the first query parameter named `name`, percent-decoded.
    fn find_query(&self, name: &str) -> Option<String>;

    /// Value of the first header named `name`.
    fn find_header(&self, name: &str) -> Option<String>;

    /// Wire protocol of the call.
    fn protocol(&self) -> Protocol;

    /// Authentication facts recorded so far.
    fn auth_state(&self) -> &AuthState;

    /// Mutable access to the authentication facts.
    fn auth_state_mut(&mut self) -> &mut AuthState;

    /// Records the verified user identity. Last write wins.
    fn set_user_info(&mut self, info: UserInfo) {
        self.auth_state_mut().set_user_info(info);
    }

    /// Records the raw auth token. Last write wins.
    fn set_auth_token(&mut self, token: &str) {
        self.auth_state_mut().set_auth_token(token);
    }
}
