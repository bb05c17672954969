use crate::domain::RoundConfiguration;
use std::fmt;
use std::time::Duration;

/// Set of networks invited to bid concurrently under one timeout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuctionRound {
    id: String,
    timeout: Option<Duration>,
    demands: Vec<String>,
}

impl AuctionRound {
    pub fn new(id: impl Into<String>, timeout: Option<Duration>, demands: Vec<String>) -> Self {
        Self {
            id: id.into(),
            timeout: timeout.filter(|timeout| !timeout.is_zero()),
            demands,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Round timeout, `None` when the round waits for every provider
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Invited network identifiers in invitation order
    pub fn demands(&self) -> &[String] {
        &self.demands
    }
}

impl From<&RoundConfiguration> for AuctionRound {
    fn from(configuration: &RoundConfiguration) -> Self {
        Self::new(
            configuration.id.clone(),
            configuration.timeout(),
            configuration.demands.clone(),
        )
    }
}

impl fmt::Display for AuctionRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round '{}' ", self.id)?;
        match self.timeout {
            Some(timeout) => write!(f, "(timeout: {}ms", timeout.as_millis())?,
            None => write!(f, "(no timeout")?,
        }
        write!(f, ", demands: {})", self.demands.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_is_disabled() {
        let round = AuctionRound::new("r", Some(Duration::ZERO), vec![]);
        assert_eq!(round.timeout(), None);
    }

    #[test]
    fn test_display() {
        let round = AuctionRound::new(
            "ROUND_1",
            Some(Duration::from_millis(250)),
            vec!["admob".into(), "meta".into()],
        );
        assert_eq!(
            round.to_string(),
            "round 'ROUND_1' (timeout: 250ms, demands: admob, meta)"
        );
    }
}
