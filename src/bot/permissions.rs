use crate::types::ChatMessage;

/// Who may run a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone in chat
    Open,
    /// Moderators, the broadcaster, and the users in this command's allow-list
    Privileged { allow_list: Vec<String> },
}

impl Access {
    pub fn privileged() -> Self {
        Access::Privileged {
            allow_list: Vec::new(),
        }
    }

    pub fn privileged_with(allow_list: Vec<String>) -> Self {
        Access::Privileged { allow_list }
    }

    pub fn is_authorized(&self, message: &ChatMessage) -> bool {
        match self {
            Access::Open => true,
            Access::Privileged { allow_list } => {
                message.is_privileged()
                    || allow_list
                        .iter()
                        .any(|user| user.eq_ignore_ascii_case(&message.username))
            }
        }
    }
}
