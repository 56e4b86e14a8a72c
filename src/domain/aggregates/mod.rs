//! Aggregates module
pub mod cart;
pub mod message;
pub mod order;
pub mod product;
pub mod taxonomy;
pub mod view;

pub use cart::{Cart, CartError, CartLine};
pub use message::ChatMessage;
pub use order::{Actor, CheckoutForm, Order, OrderDraft, OrderItem, OrderOwner, OrderStatus, UserProfile};
pub use product::{Badge, Product, ProductPatch, ProductVariant, Review, Variant};
pub use taxonomy::{Category, CategoryPatch, Subcategory, SubcategoryPatch};
pub use view::ProductView;
