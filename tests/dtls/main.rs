mod common;
mod close;
mod data;
mod epoch;
mod flight;
