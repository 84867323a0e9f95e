pub mod clock;
pub mod model;
pub mod session;
pub mod snowflake;
pub mod util;
