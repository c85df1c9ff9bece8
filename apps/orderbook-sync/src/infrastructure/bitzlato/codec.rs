//! Ranger Stream Codec
//!
//! Maps raw ranger frames and REST depth bodies to normalized events.
//!
//! Data frames are single-key objects named after the stream:
//!
//! ```json
//! {"btcusdt.trade": {"trades": [{"tid": 1, "taker_type": "buy", ...}]}}
//! {"btcusdt.ob-inc": {"asks": ["100.5", "0.3"], "sequence": 42}}
//! ```
//!
//! Anything else (subscription acks, errors, other streams) is a control
//! frame and decodes to `None`. Decoding is pure: the receipt timestamp is
//! supplied by the caller.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::messages::{BookPayload, DepthResponse, LevelSet, TradesPayload, WireLevel, WireTrade};
use crate::domain::error::DecodeError;
use crate::domain::market::{
    DiffEvent, OrderBookEvent, PriceLevel, SnapshotEvent, TakerSide, TradeEvent, TradeFill,
    TradingPair,
};
use crate::domain::streaming::{RawStreamMessage, StreamKind, StreamSubscription};

/// Suffix of the book snapshot the venue pushes after an `ob-inc` subscribe.
const BOOK_SNAPSHOT_SUFFIX: &str = ".ob-snap";

/// Trade stream name as echoed by some ranger versions.
const TRADES_PLURAL_SUFFIX: &str = ".trades";

/// Stateless decoder for Bitzlato payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamCodec;

impl StreamCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a frame from a stream of the subscription's kind.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the frame names a subscribed stream but its
    /// body is malformed, or if the frame is not JSON at all.
    pub fn decode(
        &self,
        raw: &RawStreamMessage,
        subscription: &StreamSubscription,
        received_at: DateTime<Utc>,
    ) -> Result<Option<OrderBookEvent>, DecodeError> {
        match subscription.kind() {
            StreamKind::Trades => self.decode_trade(raw, subscription, received_at),
            StreamKind::Diffs => self.decode_diff(raw, subscription, received_at),
        }
    }

    /// Decode a trade frame.
    ///
    /// # Errors
    ///
    /// See [`StreamCodec::decode`].
    pub fn decode_trade(
        &self,
        raw: &RawStreamMessage,
        subscription: &StreamSubscription,
        received_at: DateTime<Utc>,
    ) -> Result<Option<OrderBookEvent>, DecodeError> {
        let object = parse_object(raw)?;
        let suffixes = [StreamKind::Trades.suffix(), TRADES_PLURAL_SUFFIX];
        let Some((pair, body)) = find_stream(&object, subscription, &suffixes) else {
            return Ok(None);
        };

        let payload: TradesPayload = from_body(body, raw)?;
        let fills = payload
            .trades
            .iter()
            .map(|trade| to_fill(trade).map_err(|reason| DecodeError::new(reason, raw.to_text())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(OrderBookEvent::Trade(TradeEvent {
            pair: pair.clone(),
            fills,
            received_at,
        })))
    }

    /// Decode a diff frame. Book snapshots pushed on the same connection
    /// decode to `Snapshot` events.
    ///
    /// # Errors
    ///
    /// See [`StreamCodec::decode`].
    pub fn decode_diff(
        &self,
        raw: &RawStreamMessage,
        subscription: &StreamSubscription,
        received_at: DateTime<Utc>,
    ) -> Result<Option<OrderBookEvent>, DecodeError> {
        let object = parse_object(raw)?;

        if let Some((pair, body)) = find_stream(&object, subscription, &[StreamKind::Diffs.suffix()]) {
            let payload: BookPayload = from_body(body, raw)?;
            let (bids, asks) = book_sides(&payload, raw)?;
            return Ok(Some(OrderBookEvent::Diff(DiffEvent {
                pair: pair.clone(),
                bids,
                asks,
                update_id: payload.sequence,
                received_at,
            })));
        }

        if let Some((pair, body)) = find_stream(&object, subscription, &[BOOK_SNAPSHOT_SUFFIX]) {
            let payload: BookPayload = from_body(body, raw)?;
            let (bids, asks) = book_sides(&payload, raw)?;
            return Ok(Some(OrderBookEvent::Snapshot(SnapshotEvent {
                pair: pair.clone(),
                bids,
                asks,
                update_id: payload.sequence,
                received_at,
            })));
        }

        Ok(None)
    }

    /// Decode a REST depth body into a snapshot for `pair`.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the body is not a depth object or a level
    /// is not numeric.
    pub fn decode_snapshot(
        &self,
        pair: &TradingPair,
        body: &str,
        received_at: DateTime<Utc>,
    ) -> Result<SnapshotEvent, DecodeError> {
        let depth: DepthResponse =
            serde_json::from_str(body).map_err(|e| DecodeError::new(e.to_string(), body))?;

        let to_levels = |levels: &[WireLevel]| {
            levels
                .iter()
                .map(|level| level.to_level().map_err(|text| not_a_number(&text, body)))
                .collect::<Result<Vec<PriceLevel>, DecodeError>>()
        };

        Ok(SnapshotEvent {
            pair: pair.clone(),
            bids: to_levels(&depth.bids)?,
            asks: to_levels(&depth.asks)?,
            update_id: depth.timestamp,
            received_at,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_object(raw: &RawStreamMessage) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_slice::<Value>(raw.as_bytes()) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(DecodeError::new("frame is not a JSON object", raw.to_text())),
        Err(e) => Err(DecodeError::new(e.to_string(), raw.to_text())),
    }
}

/// First key naming a subscribed pair with one of `suffixes`.
fn find_stream<'a>(
    object: &'a Map<String, Value>,
    subscription: &'a StreamSubscription,
    suffixes: &[&str],
) -> Option<(&'a TradingPair, &'a Value)> {
    object.iter().find_map(|(key, body)| {
        let venue_pair = suffixes.iter().find_map(|s| key.strip_suffix(s))?;
        subscription.resolve(venue_pair).map(|pair| (pair, body))
    })
}

fn from_body<T: DeserializeOwned>(body: &Value, raw: &RawStreamMessage) -> Result<T, DecodeError> {
    T::deserialize(body).map_err(|e| DecodeError::new(e.to_string(), raw.to_text()))
}

fn book_sides(
    payload: &BookPayload,
    raw: &RawStreamMessage,
) -> Result<(Vec<PriceLevel>, Vec<PriceLevel>), DecodeError> {
    let side = |set: Option<&LevelSet>| {
        set.map_or_else(|| Ok(Vec::new()), LevelSet::to_levels)
            .map_err(|text| not_a_number(&text, &raw.to_text()))
    };
    Ok((side(payload.bids.as_ref())?, side(payload.asks.as_ref())?))
}

fn to_fill(trade: &WireTrade) -> Result<TradeFill, String> {
    let taker_side = match trade.taker_type.as_str() {
        "buy" => TakerSide::Buy,
        "sell" => TakerSide::Sell,
        other => return Err(format!("unknown taker_type {other:?}")),
    };
    Ok(TradeFill {
        trade_id: trade.tid,
        price: trade.price.to_decimal().map_err(|t| format!("price {t:?} is not a number"))?,
        amount: trade.amount.to_decimal().map_err(|t| format!("amount {t:?} is not a number"))?,
        taker_side,
        venue_time: trade.date,
    })
}

fn not_a_number(text: &str, raw: &str) -> DecodeError {
    DecodeError::new(format!("{text:?} is not a number"), raw)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn subscription(kind: StreamKind) -> StreamSubscription {
        StreamSubscription::new(
            kind,
            [
                (TradingPair::from("BTC-USDT"), "btcusdt".to_string()),
                (TradingPair::from("ETH-BTC"), "ethbtc".to_string()),
            ],
        )
    }

    fn raw(text: &str) -> RawStreamMessage {
        RawStreamMessage::new(text)
    }

    #[test]
    fn decodes_trade_frame() {
        let now = Utc::now();
        let frame = raw(
            r#"{"btcusdt.trade":{"trades":[{"tid":11,"taker_type":"sell","date":1700000000,"price":"35000.5","amount":"0.01"}]}}"#,
        );

        let event = StreamCodec::new()
            .decode(&frame, &subscription(StreamKind::Trades), now)
            .unwrap()
            .unwrap();

        let OrderBookEvent::Trade(trade) = event else {
            panic!("expected trade");
        };
        assert_eq!(trade.pair.as_str(), "BTC-USDT");
        assert_eq!(trade.received_at, now);
        assert_eq!(trade.fills.len(), 1);
        assert_eq!(trade.fills[0].trade_id, Some(11));
        assert_eq!(trade.fills[0].price, dec!(35000.5));
        assert_eq!(trade.fills[0].taker_side, TakerSide::Sell);
    }

    #[test]
    fn accepts_plural_trade_suffix() {
        let frame = raw(r#"{"ethbtc.trades":{"trades":[]}}"#);
        let event = StreamCodec::new()
            .decode_trade(&frame, &subscription(StreamKind::Trades), Utc::now())
            .unwrap();
        assert_eq!(event.unwrap().pair().as_str(), "ETH-BTC");
    }

    #[test]
    fn decodes_single_level_diff() {
        let frame = raw(r#"{"btcusdt.ob-inc":{"asks":["100.5","0.3"],"sequence":42}}"#);

        let event = StreamCodec::new()
            .decode(&frame, &subscription(StreamKind::Diffs), Utc::now())
            .unwrap()
            .unwrap();

        let OrderBookEvent::Diff(diff) = event else {
            panic!("expected diff");
        };
        assert_eq!(diff.asks, vec![PriceLevel::new(dec!(100.5), dec!(0.3))]);
        assert!(diff.bids.is_empty());
        assert_eq!(diff.update_id, Some(42));
    }

    #[test]
    fn decodes_level_list_diff_with_removal() {
        let frame = raw(r#"{"ethbtc.ob-inc":{"bids":[["0.05","1"],["0.049",""]]}}"#);

        let event = StreamCodec::new()
            .decode_diff(&frame, &subscription(StreamKind::Diffs), Utc::now())
            .unwrap()
            .unwrap();

        let OrderBookEvent::Diff(diff) = event else {
            panic!("expected diff");
        };
        assert_eq!(diff.bids.len(), 2);
        assert_eq!(diff.bids[1].amount, dec!(0));
        assert_eq!(diff.update_id, None);
    }

    #[test]
    fn book_snapshot_on_diff_stream() {
        let frame = raw(r#"{"btcusdt.ob-snap":{"asks":[["101","1"]],"bids":[["99","2"]],"sequence":5}}"#);

        let event = StreamCodec::new()
            .decode_diff(&frame, &subscription(StreamKind::Diffs), Utc::now())
            .unwrap()
            .unwrap();

        assert!(matches!(event, OrderBookEvent::Snapshot(ref s) if s.update_id == Some(5)));
    }

    #[test]
    fn control_frames_decode_to_none() {
        let codec = StreamCodec::new();
        let sub = subscription(StreamKind::Trades);
        for frame in [
            r#"{"success":{"message":"subscribed","streams":["btcusdt.trade"]}}"#,
            r#"{"ltcusdt.trade":{"trades":[]}}"#,
            r#"{"btcusdt.ob-inc":{"asks":[]}}"#,
        ] {
            assert_eq!(codec.decode(&raw(frame), &sub, Utc::now()).unwrap(), None);
        }
    }

    #[test]
    fn malformed_json_is_error() {
        let err = StreamCodec::new()
            .decode(&raw("{not json"), &subscription(StreamKind::Trades), Utc::now())
            .unwrap_err();
        assert_eq!(err.raw(), "{not json");
    }

    #[test]
    fn invalid_utf8_is_error() {
        let mut bytes = br#"{"btcusdt.trade":{"trades":[]}}"#.to_vec();
        bytes[3] = 0xff;
        let err = StreamCodec::new()
            .decode(
                &RawStreamMessage::new(bytes),
                &subscription(StreamKind::Trades),
                Utc::now(),
            )
            .unwrap_err();
        assert!(err.raw().contains('\u{fffd}'));
    }

    #[test]
    fn bad_trade_body_is_error() {
        let frame = raw(r#"{"btcusdt.trade":{"trades":[{"taker_type":"hold","price":"1","amount":"1"}]}}"#);
        let err = StreamCodec::new()
            .decode(&frame, &subscription(StreamKind::Trades), Utc::now())
            .unwrap_err();
        assert!(err.reason().contains("taker_type"));
    }

    #[test]
    fn non_numeric_level_is_error() {
        let frame = raw(r#"{"btcusdt.ob-inc":{"bids":["abc","1"]}}"#);
        assert!(
            StreamCodec::new()
                .decode(&frame, &subscription(StreamKind::Diffs), Utc::now())
                .is_err()
        );
    }

    #[test]
    fn snapshot_preserves_levels() {
        let body = r#"{"timestamp":1700000000,"asks":[["101.5","2"],["102","1"]],"bids":[["99","3"]]}"#;
        let pair = TradingPair::from("BTC-USDT");

        let snapshot = StreamCodec::new()
            .decode_snapshot(&pair, body, Utc::now())
            .unwrap();

        assert_eq!(snapshot.pair, pair);
        assert_eq!(snapshot.update_id, Some(1_700_000_000));
        assert_eq!(snapshot.asks[0], PriceLevel::new(dec!(101.5), dec!(2)));
        assert_eq!(snapshot.bids, vec![PriceLevel::new(dec!(99), dec!(3))]);
    }
}
