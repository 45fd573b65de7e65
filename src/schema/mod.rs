pub mod info;
pub mod source;
pub mod view;

pub use info::{
    builtin_provider, AssetInfo, AssetKind, Elem, FieldInfo, ProviderInfo, ResourceInfo,
    TfResource, TfSchema, ValueKind,
};
pub use source::{PluginSource, ProviderInfoSource, SchemaRegistry, StaticSource};
pub use view::SchemaView;
