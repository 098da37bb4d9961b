pub mod abilities;
pub mod dice;
pub mod modifiers;
