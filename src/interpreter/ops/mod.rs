pub mod control;
pub mod data;
pub mod math;
pub mod series;
pub mod system;

// Each module exports a `NATIVES` table (and `math` an `INFIX` one);
// the helpers they share are `impl Interpreter` methods
