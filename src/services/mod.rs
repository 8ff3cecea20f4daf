pub mod checkout_service;
pub mod designer;
pub mod email_service;
pub mod order_service;
pub mod product_service;
pub mod promocode_service;
pub mod shipping;
