pub mod appointment;
pub mod doctor;
pub mod enums;
pub mod medical_record;
pub mod notification;
pub mod patient;
pub mod user;

pub use appointment::*;
pub use doctor::*;
pub use enums::*;
pub use medical_record::*;
pub use notification::*;
pub use patient::*;
pub use user::*;
