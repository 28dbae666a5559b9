pub mod quantities;

pub use quantities::{
    parse_quantity_scaled, ResourceQuantity, RESOURCE_CPU, RESOURCE_MEMORY, RESOURCE_NVIDIA_GPU,
};
