use serde_json::{json, Value};

/// Instructions sent alongside every frame.
pub const PROMPT: &str = "\
You are PRISMA, an expert price-action trader. Analyse the attached screenshot \
of a 1-minute trading chart and return one trading signal.

Primary strategy: Heikin-Ashi candles with WMA 8/20, MACD (3, 10, 5), RSI (14), \
ADX (14) and Fractal Chaos Bands.
- Bullish: WMA 8 above WMA 20, MACD above 0 and rising, RSI above 50, ADX above 25, \
strong green Heikin-Ashi candle without lower wick, break of the upper fractal band.
- Bearish: the mirror image of the above.
- ADX below 20 means no trend; avoid trading.

Confirm with price action: candle strength (body versus wick), engulfing, hammer \
and star patterns, support and resistance, round numbers, liquidity grabs, \
reversal versus continuation context.

Signal rules:
- CALL: bullish confluence of the primary strategy reinforced by a bullish trigger.
- PUT: bearish confluence of the primary strategy reinforced by a bearish trigger.
- WAIT: ADX below 25, conflicting indicators, doji or indecision candles, or price \
trapped inside the fractal bands or between the moving averages.

Read the asset name and current price from the chart; use 0 for the price if it is \
not visible. Rate confidence from 1 (very low) to 10 (very high). Answer only with \
the requested JSON.";

/// Response schema enforcing the shape of `common::Analysis`.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "asset": {
                "type": "STRING",
                "description": "Traded instrument, e.g. 'EUR/USD'."
            },
            "price": {
                "type": "NUMBER",
                "description": "Current market price read from the chart, 0 if unreadable."
            },
            "signal": {
                "type": "STRING",
                "enum": ["CALL", "PUT", "WAIT"],
                "description": "CALL to buy, PUT to sell, WAIT without a clear setup."
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Confidence from 1 (very low) to 10 (very high)."
            },
            "reasoning": {
                "type": "STRING",
                "description": "Technical justification of the signal."
            },
            "indicators": {
                "type": "OBJECT",
                "properties": {
                    "rsi": { "type": "NUMBER", "description": "RSI (14), 0 to 100." },
                    "macd": { "type": "NUMBER", "description": "MACD (3, 10, 5) line value." },
                    "adx": { "type": "NUMBER", "description": "ADX (14) trend strength." },
                    "wma8": { "type": "NUMBER", "description": "8-period weighted moving average." },
                    "wma20": { "type": "NUMBER", "description": "20-period weighted moving average." },
                    "heikinAshi": {
                        "type": "STRING",
                        "enum": ["STRONG_BULLISH", "STRONG_BEARISH", "NEUTRAL", "INDECISION"]
                    },
                    "fractalBreakout": {
                        "type": "STRING",
                        "enum": ["UP", "DOWN", "NONE"]
                    },
                    "candlestickPattern": { "type": "STRING" },
                    "priceActionContext": { "type": "STRING" }
                },
                "required": [
                    "rsi", "macd", "adx", "wma8", "wma20", "heikinAshi",
                    "fractalBreakout", "candlestickPattern", "priceActionContext"
                ]
            }
        },
        "required": ["asset", "price", "signal", "confidence", "reasoning", "indicators"]
    })
}
