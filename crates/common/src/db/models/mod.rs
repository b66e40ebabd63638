//! SeaORM entity models
//!
//! Catalog entities: products, their aliases, stores and price records.

mod price_record;
mod product;
mod product_alias;
mod store;

pub use product::{
    Entity as ProductEntity,
    Model as Product,
    ActiveModel as ProductActiveModel,
    Column as ProductColumn,
};

pub use product_alias::{
    Entity as ProductAliasEntity,
    Model as ProductAlias,
    ActiveModel as ProductAliasActiveModel,
    Column as ProductAliasColumn,
};

pub use store::{
    Entity as StoreEntity,
    Model as Store,
    ActiveModel as StoreActiveModel,
    Column as StoreColumn,
    UNSPECIFIED_CITY,
    UNSPECIFIED_DISTRICT,
};

pub use price_record::{
    Entity as PriceRecordEntity,
    Model as PriceRecord,
    ActiveModel as PriceRecordActiveModel,
    Column as PriceRecordColumn,
};
