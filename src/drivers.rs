//! Hardware drivers implementing [`Actuator`](crate::actuator::Actuator).

pub mod sysfs_pin;
