pub mod backend;
pub mod clock;
pub mod events;
pub mod gpu_context;
pub mod input_adapter;
pub mod lifecycle;
pub mod resources;
pub mod scheduler;
pub mod surface_renderer;
pub mod window;
