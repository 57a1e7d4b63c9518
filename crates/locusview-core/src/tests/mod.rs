mod registry;
mod requester;
mod support;
