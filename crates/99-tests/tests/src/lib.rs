//! End-to-end tests for the pageview agent against the recording mock host.

#[cfg(test)]
mod delivery;

#[cfg(test)]
mod navigation;

#[cfg(test)]
mod pre_init_queue;
