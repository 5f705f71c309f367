pub mod mandi;
pub mod open_meteo;
pub mod openai;

pub use mandi::MandiPriceBoard;
pub use open_meteo::OpenMeteoWeather;
pub use openai::OpenAiCompatibleClient;
