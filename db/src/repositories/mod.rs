pub mod result_repository;

pub use result_repository::ResultRepository;
