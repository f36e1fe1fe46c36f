use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Trading signal returned by the vision model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Call,
    Put,
    Wait,
}

impl TradeSignal {
    /// CALL and PUT produce history entries and simulated orders; WAIT never does.
    pub fn is_tradeable(self) -> bool {
        matches!(self, TradeSignal::Call | TradeSignal::Put)
    }

    pub fn order_side(self) -> Option<OrderSide> {
        match self {
            TradeSignal::Call => Some(OrderSide::Buy),
            TradeSignal::Put => Some(OrderSide::Sell),
            TradeSignal::Wait => None,
        }
    }
}

impl std::fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSignal::Call => write!(f, "CALL"),
            TradeSignal::Put => write!(f, "PUT"),
            TradeSignal::Wait => write!(f, "WAIT"),
        }
    }
}

/// Side of a simulated trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeikinAshi {
    StrongBullish,
    StrongBearish,
    Neutral,
    Indecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalBreakout {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
    #[serde(rename = "NONE")]
    NoBreakout,
}

/// Indicator readings the model extracted from the chart. Carried through
/// untouched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    pub rsi: f64,
    pub macd: f64,
    pub adx: f64,
    pub wma8: f64,
    pub wma20: f64,
    pub heikin_ashi: HeikinAshi,
    pub fractal_breakout: FractalBreakout,
    pub candlestick_pattern: String,
    pub price_action_context: String,
}

/// One chart analysis as returned by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub asset: String,
    /// `0.0` means the model could not read a quote.
    #[serde(default)]
    pub price: f64,
    pub signal: TradeSignal,
    /// 1 (very low) to 10 (very high).
    pub confidence: f64,
    pub reasoning: String,
    pub indicators: Indicators,
}

impl Analysis {
    /// Reject values outside the documented ranges.
    pub fn validate(self) -> Result<Self> {
        if self.asset.trim().is_empty() {
            return Err(Error::MalformedAnalysis("asset is empty".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(Error::MalformedAnalysis(format!(
                "price must be a non-negative number, got {}",
                self.price
            )));
        }
        if !(1.0..=10.0).contains(&self.confidence) {
            return Err(Error::MalformedAnalysis(format!(
                "confidence must be within 1..=10, got {}",
                self.confidence
            )));
        }
        Ok(self)
    }

    pub fn quoted_price(&self) -> Option<f64> {
        (self.price > 0.0).then_some(self.price)
    }
}

/// A tradeable analysis kept in the signal history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalLog {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub analysis: Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotLogKind {
    Info,
    Success,
    Error,
    Signal,
}

/// One line of the auto-trader activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotLog {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: BotLogKind,
}

/// Connection state of the simulated auto-trader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotStatus::Disconnected => write!(f, "disconnected"),
            BotStatus::Connecting => write!(f, "connecting"),
            BotStatus::Connected => write!(f, "connected"),
            BotStatus::Error => write!(f, "error"),
        }
    }
}

/// Why the last attempt to start screen capture failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureError {
    pub title: String,
    pub message: String,
}

impl CaptureError {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied() -> Self {
        Self::new(
            "Screen permission denied",
            "Screen sharing is required for the chart analysis. Start capture again \
             and allow sharing; if no prompt appears, check the browser settings.",
        )
    }

    pub fn device(reason: impl std::fmt::Display) -> Self {
        Self::new(
            "Capture error",
            format!(
                "Could not start screen capture: {reason}. Reload the page or check \
                 the browser permissions."
            ),
        )
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// A fictitious order echoed to the bot log when a tradeable signal arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub id: String,
    pub asset: String,
    pub side: OrderSide,
    /// `None` when the model could not read a quote.
    pub price: Option<f64>,
    pub confidence: f64,
}

impl SimulatedOrder {
    /// `None` for WAIT.
    pub fn from_analysis(analysis: &Analysis) -> Option<Self> {
        let side = analysis.signal.order_side()?;
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            asset: analysis.asset.clone(),
            side,
            price: analysis.quoted_price(),
            confidence: analysis.confidence,
        })
    }
}
