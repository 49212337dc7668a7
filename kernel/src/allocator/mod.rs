pub mod frame_allocator;
pub mod identifier_allocator;

pub use frame_allocator::FrameAllocator;
pub use identifier_allocator::IdentifierAllocator;
