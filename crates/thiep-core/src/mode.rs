use std::fmt;

use crate::error::AppError;

/// Which screen the client is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Initial,
    Decorating,
    Sent,
    List,
    Chat,
    ViewCard,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Decorating => "decorating",
            Self::Sent => "sent",
            Self::List => "list",
            Self::Chat => "chat",
            Self::ViewCard => "view_card",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    Start,
    Back,
    /// Only emitted by the send path after the card is persisted.
    SendSucceeded,
    Reset,
    OpenList,
    CloseList,
    OpenChat,
    CloseChat,
    CloseCard,
}

impl ModeEvent {
    fn action(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Back => "go back",
            Self::SendSucceeded => "finish sending",
            Self::Reset => "reset",
            Self::OpenList => "open the card list",
            Self::CloseList => "close the card list",
            Self::OpenChat => "open chat",
            Self::CloseChat => "close chat",
            Self::CloseCard => "close the shared card",
        }
    }
}

/// Next mode for `event`, or an error when the transition does not exist.
pub fn transition(mode: Mode, event: ModeEvent) -> Result<Mode, AppError> {
    use Mode::*;
    use ModeEvent::*;

    let next = match (mode, event) {
        (Initial, Start) => Decorating,
        (Decorating, Back) => Initial,
        (Decorating, SendSucceeded) => Sent,
        (Sent, Reset) => Initial,
        (Initial, OpenList) => List,
        (List, CloseList) => Initial,
        (Initial, OpenChat) => Chat,
        (Chat, CloseChat) => Initial,
        (ViewCard, CloseCard) => Initial,
        _ => {
            return Err(AppError::InvalidTransition {
                action: event.action(),
                mode: mode.as_str(),
            });
        }
    };
    Ok(next)
}
