// ============================================================================
// MODELS
// ============================================================================
//
// One sea-orm entity per table, plus shared DTOs.
//
//   - health : health check response
//   - users : verified accounts (admin / customer)
//   - unverified_users : signups waiting for their OTP (1 hour lifetime)
//   - products : catalog
//   - reviews : product reviews, drive products.rating / review_count
//   - orders : orders with JSONB items / shipping / customer info
//   - promocodes : discount codes
//   - emails : admin inbox and sent mail
//   - uploads : uploaded images
//   - dto : request / response objects
//
// Tables are created from these definitions at startup (see db.rs).
//
// ============================================================================

pub mod health;
pub mod dto;
pub mod users;
pub mod unverified_users;
pub mod products;
pub mod reviews;
pub mod orders;
pub mod promocodes;
pub mod emails;
pub mod uploads;
