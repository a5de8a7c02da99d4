#![allow(dead_code)]

use chrono::NaiveDate;
use rusqlite::Connection;
use sprintboard_core::db::open_db_in_memory;
use sprintboard_core::{Actor, OrgRepository, Organization, SqliteOrgRepository, User};

/// One organization with an admin, a plain member and a second organization.
pub struct Fixture {
    pub conn: Connection,
    pub organization: Organization,
    pub admin: Actor,
    pub member: Actor,
    pub outsider: Actor,
    pub foreign: Actor,
}

impl Fixture {
    pub fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let organization = Organization::new("Acme");
        let other = Organization::new("Globex");
        {
            let repo = SqliteOrgRepository::new(&conn);
            repo.create_organization(&organization).unwrap();
            repo.create_organization(&other).unwrap();
        }

        let admin = add_user(&conn, &organization, "Ada");
        let member = add_user(&conn, &organization, "Bob");
        let outsider = add_user(&conn, &organization, "Cy");
        let foreign = add_user(&conn, &other, "Dee");
        SqliteOrgRepository::new(&conn)
            .add_org_admin(organization.id, admin.user_id)
            .unwrap();

        Self {
            conn,
            organization,
            admin,
            member,
            outsider,
            foreign,
        }
    }

    pub fn add_user(&self, name: &str) -> Actor {
        add_user(&self.conn, &self.organization, name)
    }
}

fn add_user(conn: &Connection, organization: &Organization, name: &str) -> Actor {
    let user = User::new(organization.id, name);
    SqliteOrgRepository::new(conn).create_user(&user).unwrap();
    Actor::new(user.id, organization.id)
}

pub fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}
