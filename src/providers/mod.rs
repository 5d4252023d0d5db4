pub mod exchange_rate;
pub mod gemini;
pub mod util;
pub mod yahoo_finance;

pub use exchange_rate::ExchangeRateApiProvider;
pub use gemini::GeminiProvider;
pub use util::{build_assistant_client, build_client};
pub use yahoo_finance::YahooFinanceProvider;
