pub mod jwt;
pub mod money;
pub mod otp;
pub mod password;
