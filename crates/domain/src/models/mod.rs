//! Domain models for the GPS tracker.

pub mod category;
pub mod device;
pub mod group;
pub mod position;
pub mod view_model;

pub use category::Category;
pub use device::{CreateDeviceRequest, Device, DeviceRegistration, NewDevice};
pub use group::Group;
pub use position::Position;
pub use view_model::ViewModelRecord;
