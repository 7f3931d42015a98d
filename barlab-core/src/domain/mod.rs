//! Domain types shared across the engine: bars, instruments, signals,
//! orders, fills, positions, trades.

pub mod bar;
pub mod fill;
pub mod instrument;
pub mod order;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError, Timeframe};
pub use fill::{Fill, FillKind, LedgerEvent, RejectReason, Rejection};
pub use instrument::{
    AShareBoard, AssetKind, InstrumentError, InstrumentId, InstrumentSpec, SpecRegistry,
};
pub use order::{Order, OrderKind, OrderSide, Signal};
pub use position::{Position, PositionDelta};
pub use trade::{TradeDirection, TradeRecord};
