//! Domain models for the storefront.
//!
//! Models are what handlers and services exchange. Database row structs live
//! next to their repositories and are converted into these types.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use cart::{CartLine, CartView, WishlistEntry};
pub use catalog::{
    Category, CategoryInput, NewProduct, NewReview, NewVariant, ProductDetail, ProductImage,
    ProductSummary, ProductUpdate, ProductVariant, Review, VariantUpdate,
};
pub use order::{Order, OrderDetail, OrderItem, OrderListEntry};
pub use payment::Payment;
pub use session::keys as session_keys;
pub use user::{Identity, User};
