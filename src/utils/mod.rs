pub mod checksum;
pub mod fmt;
pub mod interrupt;
pub mod limited_spawner;
pub mod multierr;
pub mod text;
