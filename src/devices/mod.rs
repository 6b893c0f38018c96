
// Currently the only device supported here is the Agilent 33250A.  If multiple manufacturers are
// ever supported, I'll probably organize them into modules by manufacturer

pub mod ag33250a;
