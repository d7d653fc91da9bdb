pub mod profit_factor;
pub mod sharpe;
pub mod win_rate;

pub use profit_factor::ProfitFactor;
pub use sharpe::SharpeRatio;
pub use win_rate::WinRate;
