use serde::Serialize;

/// Admin session states. `Preview` is authenticated but behaves like an
/// anonymous visitor; only `Editing` exposes the inline editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    Anonymous,
    Preview,
    Editing,
}

impl AdminState {
    /// State restored from a prior session marker: authenticated sessions
    /// come back in preview mode, never mid-edit.
    pub fn restore(has_session: bool) -> Self {
        if has_session {
            AdminState::Preview
        } else {
            AdminState::Anonymous
        }
    }

    /// Rebuild the state from a persisted session row's editing flag.
    pub fn from_session(editing: bool) -> Self {
        if editing {
            AdminState::Editing
        } else {
            AdminState::Preview
        }
    }

    /// A correct password lands directly in editing mode. A wrong password
    /// is a recoverable rejection that leaves the state unchanged.
    pub fn login(self, password: &str, stored_hash: &str) -> Result<Self, Self> {
        if crate::auth::verify_password(password, stored_hash) {
            Ok(AdminState::Editing)
        } else {
            Err(self)
        }
    }

    pub fn logout(self) -> Self {
        AdminState::Anonymous
    }

    /// Preview <-> Editing; no-op when anonymous.
    pub fn toggle_editing(self) -> Self {
        match self {
            AdminState::Preview => AdminState::Editing,
            AdminState::Editing => AdminState::Preview,
            AdminState::Anonymous => AdminState::Anonymous,
        }
    }

    pub fn is_admin(&self) -> bool {
        !matches!(self, AdminState::Anonymous)
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, AdminState::Editing)
    }
}
