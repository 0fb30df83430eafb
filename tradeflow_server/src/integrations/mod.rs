pub mod moyasar;
