#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    let rocket = estate_auth::rocket();
    log::info!("Starting Estate Auth API Server");
    rocket
}
