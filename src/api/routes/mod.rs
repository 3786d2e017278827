pub mod execute;
pub mod health;
pub mod llm;
pub mod logs;
pub mod pages;
