mod sessions;
mod timers;
