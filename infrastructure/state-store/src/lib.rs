mod mem;
mod redis;

#[rustfmt::skip]
pub use {
    mem::MemStateRepo,
    redis::RedisStateRepo,
};
