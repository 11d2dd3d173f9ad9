pub mod g2v_opt;
