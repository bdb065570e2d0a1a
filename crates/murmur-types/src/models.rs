use serde::{Deserialize, Serialize};

/// Profile gender. Drives the client's theme, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Boy,
    Girl,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boy => "Boy",
            Self::Girl => "Girl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Boy" => Some(Self::Boy),
            "Girl" => Some(Self::Girl),
            _ => None,
        }
    }
}

/// Kind of payload a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// Delivery status of a message. Ordering follows the lifecycle, so
/// `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    /// Status transitions never regress. Returns the status to store, or
    /// `None` if `next` would not move the message forward.
    pub fn advance(self, next: DeliveryStatus) -> Option<DeliveryStatus> {
        (next > self).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        assert_eq!(DeliveryStatus::Sent.advance(DeliveryStatus::Delivered), Some(DeliveryStatus::Delivered));
        assert_eq!(DeliveryStatus::Sent.advance(DeliveryStatus::Read), Some(DeliveryStatus::Read));
        assert_eq!(DeliveryStatus::Delivered.advance(DeliveryStatus::Read), Some(DeliveryStatus::Read));

        assert_eq!(DeliveryStatus::Read.advance(DeliveryStatus::Delivered), None);
        assert_eq!(DeliveryStatus::Delivered.advance(DeliveryStatus::Sent), None);
        assert_eq!(DeliveryStatus::Delivered.advance(DeliveryStatus::Delivered), None);
    }

    #[test]
    fn parse_matches_as_str() {
        for status in [DeliveryStatus::Sent, DeliveryStatus::Delivered, DeliveryStatus::Read] {
            assert_eq!(DeliveryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MessageKind::parse("video"), None);
        assert_eq!(Gender::parse("boy"), None);
    }
}
