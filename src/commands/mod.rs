// Vagrantfile generation
pub mod vagrantfile;

// Inspection
pub mod show;

// State maintenance
pub mod platform;
