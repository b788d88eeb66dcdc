//! `cellsched scan` — derived cell geometry for a bandwidth.

use std::error::Error;

use cellsched_core::{ResourceGrid, amc};

pub fn execute(bandwidth: f64) -> Result<(), Box<dyn Error>> {
    let grid = ResourceGrid::new(bandwidth, 1)?;
    println!("bandwidth:     {bandwidth} MHz");
    println!("RB per slot:   {}", grid.rb_per_slot());
    println!("RB per TTI:    {}", grid.rb_per_slot() * 2);
    println!("RBG size:      {}", grid.rbg_size());
    println!("RBG count:     {}", grid.total_rbg());
    let last = grid.rbg_indices(grid.total_rbg() - 1).len();
    if last != grid.rbg_size() {
        println!("last RBG:      {last} RBs");
    }
    println!();
    println!("{:>4} {:>6} {:>7} {:>12} {:>14}", "CQI", "mod", "rate", "bits/RB", "TTI peak kbit");
    for cqi in 1..=15u8 {
        let (modulation, rate) = amc::mcs(cqi)?;
        let bits = amc::bits_per_rb(cqi)?;
        let peak = grid.rb_per_slot() as u32 * 2 * bits;
        println!(
            "{cqi:>4} {modulation:>6} {rate:>7.3} {bits:>12} {:>14.1}",
            peak as f64 / 1000.0
        );
    }
    Ok(())
}
