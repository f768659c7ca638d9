pub mod local_kv;

pub mod prelude {
    pub use super::local_kv::Entity as LocalKv;
}
